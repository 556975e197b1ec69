pub mod answers;
pub mod mission;
pub mod review;
pub mod status;
pub mod survey;
