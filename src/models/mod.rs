pub mod alert;
pub mod coordinates;
pub mod event;
pub mod load;
pub mod tracking;
