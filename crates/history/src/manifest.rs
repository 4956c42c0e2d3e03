use std::collections::BTreeSet;

use flicksy_resources::ResourceId;

/// Lists every resource id a project references.
///
/// Implemented for any `Fn(&T) -> impl IntoIterator<Item = ResourceId>`, so a
/// plain function or closure works. Duplicates collapse; order is irrelevant.
/// The returned collection must be owned (e.g. a `Vec`), not borrow the project.
pub trait Manifest<T> {
    fn resources(&self, project: &T) -> BTreeSet<ResourceId>;
}

impl<T, F, I> Manifest<T> for F
where
    F: Fn(&T) -> I,
    I: IntoIterator<Item = ResourceId>,
{
    fn resources(&self, project: &T) -> BTreeSet<ResourceId> {
        self(project).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scenes(Vec<u64>);

    fn textures(project: &Scenes) -> Vec<ResourceId> {
        project.0.iter().copied().map(ResourceId).collect()
    }

    #[test]
    fn function_manifest_collapses_duplicates() {
        let project = Scenes(vec![3, 1, 3, 2]);
        let ids = textures.resources(&project);
        assert_eq!(
            ids.into_iter().collect::<Vec<_>>(),
            vec![ResourceId(1), ResourceId(2), ResourceId(3)]
        );
    }

    #[test]
    fn closure_manifest() {
        let manifest = |p: &Scenes| p.0.first().copied().map(ResourceId);
        assert_eq!(manifest.resources(&Scenes(vec![])).len(), 0);
        assert!(manifest.resources(&Scenes(vec![5, 6])).contains(&ResourceId(5)));
    }
}
