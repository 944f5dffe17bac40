pub mod executor;
pub mod planner;
pub mod proactive;
pub mod recommend;
pub mod tools;
