use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::foundation::error::{MovieError, MovieResult};
use crate::scene::handle::{SceneHandle, SceneObject};
use crate::script::stage::{CrossFade, ResliceSweep, RotationSweep, Stage};

/// Ordered list of stages making up one movie.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Script {
    /// Stages, run strictly in order.
    pub stages: Vec<Stage>,
}

impl Default for Script {
    fn default() -> Self {
        Self::default_movie()
    }
}

impl Script {
    /// The standard movie: full turn, fade the volume out, reslice down and back, fade it in.
    pub fn default_movie() -> Self {
        let hold = Stage::StillWait { frames: 20 };
        Self {
            stages: vec![
                Stage::Rotate(RotationSweep::default()),
                hold.clone(),
                Stage::CrossFade(CrossFade::default()),
                hold.clone(),
                Stage::Reslice(ResliceSweep::default()),
                hold,
                Stage::CrossFade(CrossFade {
                    from: 1.0,
                    to: 0.0,
                    ..CrossFade::default()
                }),
            ],
        }
    }

    /// Read a script from a JSON file.
    pub fn load(path: &Path) -> MovieResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read script '{}'", path.display()))?;
        let script: Self = serde_json::from_str(&text)
            .map_err(|e| MovieError::serde(format!("parse script '{}': {e}", path.display())))?;
        script.validate()?;
        Ok(script)
    }

    /// Check every stage's parameters.
    pub fn validate(&self) -> MovieResult<()> {
        for (i, stage) in self.stages.iter().enumerate() {
            stage
                .validate()
                .map_err(|e| MovieError::script(format!("stage {i} ({}): {e}", stage.name())))?;
        }
        Ok(())
    }

    /// Every scene object any stage refers to.
    pub fn required_objects(&self) -> BTreeSet<SceneObject> {
        self.stages
            .iter()
            .flat_map(Stage::required_objects)
            .collect()
    }

    /// Fail if `scene` lacks an object this script needs.
    pub fn check_scene(&self, scene: &dyn SceneHandle) -> MovieResult<()> {
        let missing: Vec<String> = self
            .required_objects()
            .into_iter()
            .filter(|o| !scene.contains(*o))
            .map(|o| o.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(MovieError::script(format!(
                "scene is missing required objects: {}",
                missing.join(", ")
            )))
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/script/movie.rs"]
mod tests;
