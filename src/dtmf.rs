//! DTMF menu tree and digit-sequence navigation.
//!
//! Each call buffers the digits it has received since the last reset; the
//! buffer is matched against a configured decision tree. Reaching a node
//! with a terminal action fires it and resets the buffer; a digit with no
//! matching child is an invalid selection and also resets the buffer.

use std::collections::HashMap;
use std::sync::Arc;

use crate::stack::CallId;

/// Terminal action attached to a menu node, invoked with the call it fired on.
pub type MenuAction = Arc<dyn Fn(CallId) + Send + Sync>;

/// One node of the DTMF decision tree.
#[derive(Default, Clone)]
pub struct MenuNode {
    children: HashMap<char, MenuNode>,
    action: Option<MenuAction>,
}

impl MenuNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leaf node carrying a terminal action.
    pub fn action(action: MenuAction) -> Self {
        Self {
            children: HashMap::new(),
            action: Some(action),
        }
    }

    /// Builder-style child attachment.
    pub fn child(mut self, digit: char, node: MenuNode) -> Self {
        self.children.insert(digit, node);
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Result of matching a buffered digit sequence against the tree.
pub enum MenuOutcome {
    /// Valid prefix of a deeper selection; keep buffering.
    Descend,
    /// A terminal action was reached; the caller must reset the buffer.
    Fire(MenuAction),
    /// No child for the last digit; the caller must reset the buffer.
    Invalid,
}

/// Walk the tree from the root following `digits`.
pub fn resolve(root: &MenuNode, digits: &[char]) -> MenuOutcome {
    let mut node = root;
    for digit in digits {
        match node.children.get(digit) {
            Some(next) => node = next,
            None => return MenuOutcome::Invalid,
        }
    }
    match &node.action {
        Some(action) => MenuOutcome::Fire(Arc::clone(action)),
        None => MenuOutcome::Descend,
    }
}
