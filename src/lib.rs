//! Interactive glTF viewer that redraws the scene as a grid of pattern
//! glyphs selected by per-cell brightness.

pub mod assets;
pub mod camera;
pub mod constants;
pub mod manifest;
pub mod motion;
pub mod pattern_pass;
pub mod scene;
pub mod scene_pass;
pub mod viewer;
