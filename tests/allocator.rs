/*!
 * Allocator tests entry point
 */

#[path = "allocator/search_test.rs"]
mod search_test;

#[path = "allocator/allocation_test.rs"]
mod allocation_test;
