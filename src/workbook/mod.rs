//! Workbook emission - persist flattened sheets as a linked xlsx file

pub mod emitter;

pub use emitter::WorkbookEmitter;
