pub mod face_enhance_processor;
pub mod face_paste_processor;
mod gaussian;
pub mod processor_factory;
