use nalgebra::Matrix4;

use crate::cross_section::PhotonCrossSection;
use crate::error::{Result, XraySimError};
use crate::mesh::{BoundingBox, PolygonMesh};

/// A mesh placed in the scene with its material.
#[derive(Debug, Clone)]
pub struct SceneGraphNode {
    name: String,
    mesh: PolygonMesh,
    transform: Matrix4<f64>,
    material: PhotonCrossSection,
}

impl SceneGraphNode {
    pub fn new(name: impl Into<String>, mesh: PolygonMesh, material: PhotonCrossSection) -> Self {
        SceneGraphNode {
            name: name.into(),
            mesh,
            transform: Matrix4::identity(),
            material,
        }
    }

    pub fn with_transform(mut self, transform: Matrix4<f64>) -> Self {
        self.transform = transform;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mesh(&self) -> &PolygonMesh {
        &self.mesh
    }

    pub fn transform(&self) -> &Matrix4<f64> {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: Matrix4<f64>) {
        self.transform = transform;
    }

    pub fn material(&self) -> &PhotonCrossSection {
        &self.material
    }

    /// Bounding box after `modelling * transform`.
    pub fn world_bounding_box(&self, modelling: &Matrix4<f64>) -> BoundingBox {
        self.mesh
            .bounding_box()
            .transformed(&(modelling * self.transform))
    }
}

/// Inner surfaces, an optional outer surface, and the inner surfaces
/// grouped by material.
///
/// Buckets are rebuilt on every change. Each bucket holds the indices of
/// inner nodes whose cross-section equals that of the bucket's first node.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    inner: Vec<SceneGraphNode>,
    outer: Option<SceneGraphNode>,
    buckets: Vec<Vec<usize>>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    fn rebuild_buckets(&mut self) {
        let mut buckets: Vec<Vec<usize>> = Vec::new();
        for (i, node) in self.inner.iter().enumerate() {
            match buckets
                .iter_mut()
                .find(|b| self.inner[b[0]].material == node.material)
            {
                Some(bucket) => bucket.push(i),
                None => buckets.push(vec![i]),
            }
        }
        log::debug!(
            "{} inner surfaces in {} material buckets",
            self.inner.len(),
            buckets.len()
        );
        self.buckets = buckets;
    }

    pub fn add_inner_surface(&mut self, node: SceneGraphNode) {
        self.inner.push(node);
        self.rebuild_buckets();
    }

    pub fn remove_inner_surface(&mut self, name: &str) -> Option<SceneGraphNode> {
        let i = self.inner.iter().position(|n| n.name == name)?;
        let node = self.inner.remove(i);
        self.rebuild_buckets();
        Some(node)
    }

    pub fn clear_inner_surfaces(&mut self) {
        self.inner.clear();
        self.buckets.clear();
    }

    pub fn set_outer_surface(&mut self, node: SceneGraphNode) {
        self.outer = Some(node);
    }

    pub fn remove_outer_surface(&mut self) -> Option<SceneGraphNode> {
        self.outer.take()
    }

    /// Replace the material of a node, inner or outer.
    pub fn set_material(&mut self, name: &str, material: PhotonCrossSection) -> Result<()> {
        if let Some(node) = self.inner.iter_mut().find(|n| n.name == name) {
            node.material = material;
            self.rebuild_buckets();
            return Ok(());
        }
        match self.outer.as_mut().filter(|n| n.name == name) {
            Some(node) => {
                node.material = material;
                Ok(())
            }
            None => Err(XraySimError::UnknownMaterial(format!("no scene node named {name}"))),
        }
    }

    pub fn set_transform(&mut self, name: &str, transform: Matrix4<f64>) -> Result<()> {
        self.node_mut(name)
            .ok_or_else(|| XraySimError::UnknownMaterial(format!("no scene node named {name}")))?
            .set_transform(transform);
        Ok(())
    }

    pub fn node(&self, name: &str) -> Option<&SceneGraphNode> {
        self.inner
            .iter()
            .chain(self.outer.iter())
            .find(|n| n.name == name)
    }

    fn node_mut(&mut self, name: &str) -> Option<&mut SceneGraphNode> {
        self.inner
            .iter_mut()
            .chain(self.outer.iter_mut())
            .find(|n| n.name == name)
    }

    pub fn inner_surfaces(&self) -> &[SceneGraphNode] {
        &self.inner
    }

    pub fn outer_surface(&self) -> Option<&SceneGraphNode> {
        self.outer.as_ref()
    }

    pub fn material_buckets(&self) -> &[Vec<usize>] {
        &self.buckets
    }

    /// Nodes of one bucket, in insertion order.
    pub fn bucket(&self, index: usize) -> impl Iterator<Item = &SceneGraphNode> {
        self.buckets
            .get(index)
            .into_iter()
            .flatten()
            .map(|&i| &self.inner[i])
    }

    pub fn has_geometry(&self) -> bool {
        !self.inner.is_empty() || self.outer.is_some()
    }

    /// Bounding box of every node under `modelling`.
    pub fn bounding_box(&self, modelling: &Matrix4<f64>) -> BoundingBox {
        self.inner
            .iter()
            .chain(self.outer.iter())
            .fold(BoundingBox::empty(), |acc, n| {
                acc.union(&n.world_bounding_box(modelling))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material(mu: f64) -> PhotonCrossSection {
        let mut cs = PhotonCrossSection::new();
        cs.use_linear_attenuation_coefficient(mu);
        cs
    }

    #[test]
    fn test_buckets_group_equal_materials() {
        let mut scene = Scene::new();
        scene.add_inner_surface(SceneGraphNode::new("a", PolygonMesh::cube(1.0), material(1.0)));
        scene.add_inner_surface(SceneGraphNode::new("b", PolygonMesh::cube(2.0), material(2.0)));
        scene.add_inner_surface(SceneGraphNode::new("c", PolygonMesh::cube(3.0), material(1.0)));
        assert_eq!(scene.material_buckets(), &[vec![0, 2], vec![1]]);

        scene.set_material("b", material(1.0)).unwrap();
        assert_eq!(scene.material_buckets(), &[vec![0, 1, 2]]);

        scene.remove_inner_surface("a").unwrap();
        assert_eq!(scene.material_buckets(), &[vec![0, 1]]);
        assert_eq!(scene.bucket(0).map(|n| n.name()).collect::<Vec<_>>(), ["b", "c"]);
    }

    #[test]
    fn test_outer_surface_is_not_bucketed() {
        let mut scene = Scene::new();
        scene.set_outer_surface(SceneGraphNode::new("body", PolygonMesh::cube(10.0), material(0.1)));
        assert!(scene.material_buckets().is_empty());
        assert!(scene.has_geometry());
        scene.set_material("body", material(0.2)).unwrap();
        assert!(scene.set_material("missing", material(0.2)).is_err());
        assert!((scene.bounding_box(&Matrix4::identity()).diagonal() - 300.0_f64.sqrt()).abs() < 1e-12);
    }
}
