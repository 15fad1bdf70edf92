//! Kitchen scene composition.
//!
//! Picks a kitchen layout and style, places fixtures and task objects
//! without overlap, binds task roles to fixtures and derives a robot
//! base pose. Every random choice comes from one seeded PCG32 stream,
//! and the resulting episode metadata replays the same scene.
//!
//! `assemble_json` takes a JSON string (`SceneParams`) and returns a
//! JSON string (`SceneResult`). With the `python` feature the same
//! entry point is importable from Python.

pub mod backend;
pub mod cameras;
pub mod catalog;
pub mod error;
pub mod fixtures;
pub mod geometry;
pub mod layouts;
pub mod metadata;
pub mod placement;
pub mod prng;
pub mod robot;
pub mod rotation;
pub mod scene;
pub mod tasks;
pub mod types;

#[cfg(test)]
mod test_support;

pub use error::SceneError;
pub use scene::{assemble, assemble_json, assemble_many, assemble_with, SceneResult};
pub use types::SceneParams;

#[cfg(feature = "python")]
mod python {
    use pyo3::exceptions::PyValueError;
    use pyo3::prelude::*;

    /// Assemble a kitchen scene.
    ///
    /// Takes a JSON string matching `SceneParams` and returns a JSON
    /// string matching `SceneResult`.
    #[pyfunction]
    fn assemble_scene_json(params_json: &str) -> PyResult<String> {
        crate::assemble_json(params_json).map_err(|e| PyValueError::new_err(e.to_string()))
    }

    #[pymodule]
    fn kitchen_scene(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(assemble_scene_json, m)?)?;
        Ok(())
    }
}
