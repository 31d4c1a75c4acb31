pub mod catalog;
pub mod domain;
pub mod ports;

pub use domain::{Author, Book, BookChanges, EntityId, NewBook, Publisher, User, UserCredentials};
pub use ports::{CatalogUnit, DatabaseService, PortError, PortResult};
