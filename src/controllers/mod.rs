pub mod allocation_handler;
pub mod clear_handler;
pub mod routine_handler;
pub mod timeslot_handler;
