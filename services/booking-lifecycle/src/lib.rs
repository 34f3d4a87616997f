//! Library surface of the booking-lifecycle service, exposed so the
//! integration tests can drive the service against a fake record store.

pub mod service;
