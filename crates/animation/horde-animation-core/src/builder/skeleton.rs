//! Skeleton, skeleton mask and skinned mesh builders.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::definition::{SkeletonDefinition, SkeletonMaskDefinition, SkinnedMeshDefinition};
use crate::error::BuildError;
use crate::hash::StringHash;
use crate::math::AffineTransform;

fn default_rotation() -> Quat {
    Quat::IDENTITY
}

fn default_scale() -> Vec3 {
    Vec3::ONE
}

fn default_true() -> bool {
    true
}

/// One bone, identified by its path from the skeleton root.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoneAuthoring {
    pub path: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub translation: Vec3,
    #[serde(default = "default_rotation")]
    pub rotation: Quat,
    #[serde(default = "default_scale")]
    pub scale: Vec3,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SkeletonAuthoring {
    pub bones: Vec<BoneAuthoring>,
}

#[derive(Clone, Debug, Default)]
pub struct SkeletonBuilder {
    bones: Vec<BoneAuthoring>,
}

impl SkeletonBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_authoring(authoring: &SkeletonAuthoring) -> Self {
        Self {
            bones: authoring.bones.clone(),
        }
    }

    pub fn bone(
        mut self,
        path: impl Into<String>,
        parent: Option<&str>,
        translation: Vec3,
        rotation: Quat,
        scale: Vec3,
    ) -> Self {
        self.bones.push(BoneAuthoring {
            path: path.into(),
            parent: parent.map(str::to_owned),
            translation,
            rotation,
            scale,
        });
        self
    }

    /// Resolve parents by path. An unknown parent path is an error.
    pub fn build(&self) -> Result<SkeletonDefinition, BuildError> {
        let bone_ids: Vec<StringHash> = self.bones.iter().map(|b| StringHash::new(&b.path)).collect();
        let mut parents = Vec::with_capacity(self.bones.len());
        for bone in &self.bones {
            let parent = match &bone.parent {
                None => -1,
                Some(path) => self
                    .bones
                    .iter()
                    .position(|b| &b.path == path)
                    .map(|i| i as i32)
                    .ok_or_else(|| BuildError::UnknownBone { path: path.clone() })?,
            };
            parents.push(parent);
        }
        let skeleton = SkeletonDefinition::new(
            bone_ids,
            parents,
            self.bones.iter().map(|b| b.translation).collect(),
            self.bones.iter().map(|b| b.rotation.normalize()).collect(),
            self.bones.iter().map(|b| b.scale).collect(),
        );
        skeleton.validate()?;
        Ok(skeleton)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaskBoneAuthoring {
    pub path: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MaskAuthoring {
    pub bones: Vec<MaskBoneAuthoring>,
}

#[derive(Clone, Debug, Default)]
pub struct SkeletonMaskBuilder {
    bones: Vec<MaskBoneAuthoring>,
}

impl SkeletonMaskBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_authoring(authoring: &MaskAuthoring) -> Self {
        Self {
            bones: authoring.bones.clone(),
        }
    }

    pub fn bone(mut self, path: impl Into<String>, active: bool) -> Self {
        self.bones.push(MaskBoneAuthoring {
            path: path.into(),
            active,
        });
        self
    }

    pub fn build(&self) -> SkeletonMaskDefinition {
        SkeletonMaskDefinition::new(
            self.bones.iter().map(|b| StringHash::new(&b.path)).collect(),
            self.bones.iter().map(|b| b.active).collect(),
        )
    }
}

/// Skin bone bound by path, with its bind pose as translation, rotation and scale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeshBoneAuthoring {
    pub path: String,
    #[serde(default)]
    pub bind_translation: Vec3,
    #[serde(default = "default_rotation")]
    pub bind_rotation: Quat,
    #[serde(default = "default_scale")]
    pub bind_scale: Vec3,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SkinnedMeshAuthoring {
    pub bones: Vec<MeshBoneAuthoring>,
}

/// Skinned mesh bones in mesh order, each bound to a skeleton bone by path.
#[derive(Clone, Debug, Default)]
pub struct SkinnedMeshBuilder {
    bones: Vec<(String, AffineTransform)>,
}

impl SkinnedMeshBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_authoring(authoring: &SkinnedMeshAuthoring) -> Self {
        Self {
            bones: authoring
                .bones
                .iter()
                .map(|b| {
                    let pose = AffineTransform::from_trs(b.bind_translation, b.bind_rotation.normalize(), b.bind_scale);
                    (b.path.clone(), pose)
                })
                .collect(),
        }
    }

    pub fn bone(mut self, path: impl Into<String>, bind_pose: AffineTransform) -> Self {
        self.bones.push((path.into(), bind_pose));
        self
    }

    /// Mesh bones missing from `skeleton` map to -1 and stay at their bind pose.
    pub fn build(&self, skeleton: &SkeletonDefinition) -> SkinnedMeshDefinition {
        let indices = self
            .bones
            .iter()
            .map(|(path, _)| {
                skeleton
                    .bone_index(StringHash::new(path))
                    .map_or_else(
                        || {
                            log::warn!("skinned mesh bone '{path}' is not part of the skeleton");
                            -1
                        },
                        |i| i as i32,
                    )
            })
            .collect();
        SkinnedMeshDefinition::new(indices, self.bones.iter().map(|(_, pose)| *pose).collect())
    }
}
