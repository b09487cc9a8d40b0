//! Storage - 설정 파일 저장소
//!
//! 대화 히스토리는 저장하지 않습니다. 설정 JSON만 다룹니다.

mod json;

pub use json::{JsonStore, GLOBAL_DIR_NAME, PROJECT_DIR_NAME};
