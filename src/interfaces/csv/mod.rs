//! CSV input for carts, catalog seeds and address books.

pub mod record_reader;
