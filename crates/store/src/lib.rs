pub mod schema;
pub mod store;

pub use store::{NewDriftEvent, NewSession, NewStep, Store};
