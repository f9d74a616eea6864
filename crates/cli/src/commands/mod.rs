pub mod doctor;
pub mod mark;
pub mod onboard;
pub mod serve;
pub mod status;
