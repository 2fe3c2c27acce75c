//! Test suites for the rotation worker.

mod support;
