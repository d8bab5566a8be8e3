//! XML plumbing: an owned element tree for one sentence at a time, the
//! streaming transform around it, and the STIFF vocabulary on top.

pub mod dom;
pub mod stiff;
pub mod stream;
