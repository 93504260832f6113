use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::error::{ModelErr, Result};

/// Turns a context of atoms into one feature id per template.
///
/// A template is a tuple of context positions. Its feature id is the XXH3 hash
/// of the atoms at those positions, seeded with the template index so equal
/// atoms under different templates yield different ids. A template whose atoms
/// are all `0` produces the absent sentinel `0`.
#[derive(Debug, Clone)]
pub struct Extractor {
    context_len: usize,
    templates: Vec<Box<[usize]>>,
    max_arity: usize,
}

impl Extractor {
    /// Creates a new `Extractor`.
    ///
    /// # Arguments
    /// * `context_len` - The amount of atoms in every context.
    /// * `templates` - The context positions each template reads.
    ///
    /// # Returns
    /// A new `Extractor` or `ModelErr::InvalidConfig` if a template is empty
    /// or reads a position outside of the context.
    pub fn new(context_len: usize, templates: Vec<Vec<usize>>) -> Result<Self> {
        let mut max_arity = 0;

        for (i, template) in templates.iter().enumerate() {
            if template.is_empty() {
                return Err(ModelErr::InvalidConfig(format!("template {i} is empty")));
            }

            if let Some(&pos) = template.iter().find(|&&pos| pos >= context_len) {
                return Err(ModelErr::InvalidConfig(format!(
                    "template {i} reads position {pos} of a {context_len} atom context"
                )));
            }

            max_arity = max_arity.max(template.len());
        }

        Ok(Self {
            context_len,
            templates: templates.into_iter().map(Vec::into_boxed_slice).collect(),
            max_arity,
        })
    }

    pub fn nr_templates(&self) -> usize {
        self.templates.len()
    }

    pub fn context_len(&self) -> usize {
        self.context_len
    }

    /// Writes the feature ids of `context` into `out`, one per template.
    ///
    /// # Arguments
    /// * `context` - The atoms describing the current example.
    /// * `out` - Cleared and filled with `nr_templates` feature ids.
    ///
    /// # Returns
    /// `ModelErr::ShapeMismatch` if `context` doesn't have `context_len` atoms.
    pub fn extract(&self, context: &[u64], out: &mut Vec<u64>) -> Result<()> {
        if context.len() != self.context_len {
            return Err(ModelErr::ShapeMismatch {
                what: "context",
                got: context.len(),
                expected: self.context_len,
            });
        }

        out.clear();
        out.reserve(self.templates.len());
        let mut atoms = Vec::with_capacity(self.max_arity);

        for (i, template) in self.templates.iter().enumerate() {
            atoms.clear();
            atoms.extend(template.iter().map(|&pos| context[pos]));

            if atoms.iter().all(|&atom| atom == 0) {
                out.push(0);
                continue;
            }

            let hashed = xxh3_64_with_seed(bytemuck::cast_slice(&atoms), i as u64);
            // 0 is reserved for absent features
            out.push(hashed.max(1));
        }

        Ok(())
    }
}
