/// Shorthand for diesel's result error, which otherwise collides with other
/// `Error` types in handler imports.
pub type DieselError = diesel::result::Error;
