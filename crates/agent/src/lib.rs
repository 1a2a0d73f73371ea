pub mod lookup;

pub use lookup::{Lookup, LookupEvent, LookupFailure, LookupReport};
