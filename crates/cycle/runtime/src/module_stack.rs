//! Module execution stack
//!
//! Tracks the named modules currently entered and which top-level phase
//! (init, event or main) owns the running call chain. Anonymous modules run
//! inline and are never tracked.

use cycle_types::{CycleError, Module, ModuleKind};
use std::fmt;
use std::sync::Arc;

/// Top-level phase owning the current call chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunContext {
    Init,
    Event,
    Main,
}

impl fmt::Display for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunContext::Init => "init",
            RunContext::Event => "event",
            RunContext::Main => "main",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone)]
pub struct ModuleStack {
    stack: Vec<Arc<Module>>,
    context: RunContext,
}

impl ModuleStack {
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            context: RunContext::Main,
        }
    }

    pub fn enter(&mut self, module: &Arc<Module>) {
        if module.is_anonymous() {
            return;
        }
        self.stack.push(module.clone());
        match module.kind {
            ModuleKind::Init => self.context = RunContext::Init,
            ModuleKind::Event => self.context = RunContext::Event,
            ModuleKind::Main => self.context = RunContext::Main,
            ModuleKind::User | ModuleKind::Anonymous => {}
        }
    }

    /// Leave `module`; `Ok(true)` if control returns to another named module.
    pub fn exit(&mut self, module: &Module) -> Result<bool, CycleError> {
        if module.is_anonymous() {
            return Ok(false);
        }
        if matches!(module.kind, ModuleKind::Init | ModuleKind::Event) {
            self.context = RunContext::Main;
        }
        if self.stack.pop().is_none() {
            tracing::error!(module = module.display_name(), "Module stack underflow");
            return Err(CycleError::StackUnderflow(module.display_name().to_string()));
        }
        Ok(!self.stack.is_empty())
    }

    /// Most recently entered named module.
    pub fn active(&self) -> Option<&Arc<Module>> {
        self.stack.last()
    }

    pub fn is_main_context_active(&self) -> bool {
        self.context == RunContext::Main
    }

    pub fn top_level_context(&self) -> RunContext {
        self.context
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn clear(&mut self) {
        self.stack.clear();
        self.context = RunContext::Main;
    }
}

impl Default for ModuleStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cycle_types::RuleSet;

    fn module(name: &str, kind: ModuleKind) -> Arc<Module> {
        Arc::new(Module::new(name, kind, RuleSet::empty()))
    }

    #[test]
    fn test_init_with_nested_user_module() {
        let mut stack = ModuleStack::new();
        let init = module("init", ModuleKind::Init);
        let sub = module("sub", ModuleKind::User);

        stack.enter(&init);
        assert_eq!(stack.top_level_context(), RunContext::Init);
        stack.enter(&sub);
        assert_eq!(stack.top_level_context(), RunContext::Init);
        assert_eq!(stack.active().unwrap().display_name(), "sub");

        assert!(stack.exit(&sub).unwrap());
        assert_eq!(stack.top_level_context(), RunContext::Init);
        assert!(!stack.exit(&init).unwrap());

        assert!(stack.is_main_context_active());
        assert_eq!(stack.depth(), 0);
        assert!(stack.active().is_none());
    }

    #[test]
    fn test_event_context_transitions() {
        let mut stack = ModuleStack::new();
        let main = module("main", ModuleKind::Main);
        let event = module("event", ModuleKind::Event);

        stack.enter(&main);
        assert!(stack.is_main_context_active());
        stack.enter(&event);
        assert_eq!(stack.top_level_context(), RunContext::Event);
        assert!(stack.exit(&event).unwrap());
        assert!(stack.is_main_context_active());
        assert!(!stack.exit(&main).unwrap());
    }

    #[test]
    fn test_user_module_never_changes_context() {
        let mut stack = ModuleStack::new();
        let event = module("event", ModuleKind::Event);
        let user = module("user", ModuleKind::User);

        stack.enter(&event);
        stack.enter(&user);
        stack.exit(&user).unwrap();
        assert_eq!(stack.top_level_context(), RunContext::Event);

        stack.exit(&event).unwrap();
        stack.enter(&user);
        assert_eq!(stack.top_level_context(), RunContext::Main);
        stack.exit(&user).unwrap();
        assert_eq!(stack.top_level_context(), RunContext::Main);
    }

    #[test]
    fn test_anonymous_modules_are_not_tracked() {
        let mut stack = ModuleStack::new();
        let anon = Arc::new(Module::anonymous(RuleSet::empty()));
        let init = module("init", ModuleKind::Init);

        stack.enter(&init);
        stack.enter(&anon);
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.top_level_context(), RunContext::Init);
        assert!(!stack.exit(&anon).unwrap());
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn test_underflow_is_an_error() {
        let mut stack = ModuleStack::new();
        let user = module("user", ModuleKind::User);
        let err = stack.exit(&user).unwrap_err();
        assert!(matches!(err, CycleError::StackUnderflow(ref m) if m == "user"));
        assert!(err.is_contract_violation());
    }

    #[test]
    fn test_clear_resets_context() {
        let mut stack = ModuleStack::new();
        stack.enter(&module("init", ModuleKind::Init));
        stack.clear();
        assert_eq!(stack.depth(), 0);
        assert!(stack.is_main_context_active());
    }
}
