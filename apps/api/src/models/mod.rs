pub mod career;
pub mod document;
pub mod salary;
pub mod worker;
