pub mod capture;
pub mod driver;
pub mod page;
pub mod sections;
