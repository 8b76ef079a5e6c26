pub mod fxp_tests;
pub mod determinism_tests;
pub mod checkpoint_tests;
pub mod verify_tests;
pub mod economy_tests;
