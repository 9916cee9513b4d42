pub mod fakes;

mod scan_tests;
