pub mod record;
pub mod user;

pub use record::{FieldValue, Page, Row, SelectOption, Values};
pub use user::User;
