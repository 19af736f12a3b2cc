pub mod assignment_model;
pub mod registry_model;
pub mod routine_model;
pub mod timeslot_model;
