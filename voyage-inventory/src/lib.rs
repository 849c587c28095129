pub mod manager;
pub mod memory;
pub mod policy;
pub mod sweeper;

pub use manager::{validate_seat_list, SeatAvailability, SeatInventoryManager};
pub use memory::MemoryInventoryStore;
pub use sweeper::spawn_expiry_sweeper;
