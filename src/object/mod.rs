mod store;

pub use store::ObjectStore;
