/*!
 * Buffers tests entry point
 */

#[path = "buffers/get_buffer_test.rs"]
mod get_buffer_test;
