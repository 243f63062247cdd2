pub mod clock;
pub mod test_setup;
