mod epic;
mod feature_request;

pub use epic::*;
pub use feature_request::*;
