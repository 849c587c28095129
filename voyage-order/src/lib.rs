pub mod manager;

pub use manager::ReservationManager;
