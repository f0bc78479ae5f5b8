//! Error code definitions

/// Lexical errors (E00xx)
pub mod lexical {
    pub const UNEXPECTED_CHARACTER: &str = "E0001";
    pub const UNTERMINATED_STRING: &str = "E0002";
    pub const INVALID_NUMBER: &str = "E0003";
    pub const INVALID_ESCAPE: &str = "E0004";
}

/// Grammar errors (E01xx)
pub mod syntax {
    pub const UNREADABLE_FILE: &str = "E0100";
    pub const UNEXPECTED_TOKEN: &str = "E0101";
    pub const UNEXPECTED_EOF: &str = "E0102";
    pub const INVALID_ASSIGNMENT_TARGET: &str = "E0103";
    pub const INVALID_PARAMETERS: &str = "E0104";
    pub const MISPLACED_CONTROL_FLOW: &str = "E0105";
    pub const INVALID_SPAWN: &str = "E0106";
    pub const INCOMPLETE_TRY: &str = "E0107";
}

/// Runtime errors (E4xxx)
pub mod runtime {
    pub const THROWN: &str = "E4000";
    pub const ARITY: &str = "E4001";
    pub const TYPE: &str = "E4002";
    pub const FIELD: &str = "E4003";
    pub const NAME: &str = "E4004";
    pub const IMMUTABLE_ASSIGN: &str = "E4005";
    pub const DEFINITION: &str = "E4006";
    pub const IMPORT: &str = "E4007";
}
