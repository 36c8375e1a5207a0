//! Command handlers grouped by concern.

pub(crate) mod api;
pub(crate) mod logs;
pub(crate) mod roles;
