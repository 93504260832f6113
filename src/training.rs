use crate::{
    error::Result,
    features::{ClassId, Weight},
    model::LinearModel,
    update::UpdateBatch,
};

/// Returns the class with the highest score, the lowest index on ties.
///
/// # Arguments
/// * `scores` - The score of every class.
/// * `valid` - An optional mask, classes marked `false` are never picked.
///
/// # Returns
/// `None` if no class is eligible.
pub fn argmax(scores: &[Weight], valid: Option<&[bool]>) -> Option<ClassId> {
    let mut best: Option<(ClassId, Weight)> = None;

    for (class, &score) in scores.iter().enumerate() {
        if valid.is_some_and(|mask| !mask.get(class).copied().unwrap_or(false)) {
            continue;
        }

        match best {
            Some((_, top)) if top >= score => {}
            _ => best = Some((class, score)),
        }
    }

    best.map(|(class, _)| class)
}

/// Fills `batch` with the perceptron update for a prediction.
///
/// The gold class gains `+1` on every active feature and the guessed class
/// loses `1`. A correct guess leaves the batch empty.
pub fn perceptron_batch(batch: &mut UpdateBatch, features: &[u64], guess: ClassId, gold: ClassId) {
    batch.clear();

    if guess != gold {
        batch.add_features(gold, features, 1.);
        batch.add_features(guess, features, -1.);
    }
}

impl LinearModel {
    /// Scores an example, records whether the best class was the gold one
    /// and applies the perceptron update if it wasn't.
    ///
    /// Model time advances once per example, correct or not.
    ///
    /// # Arguments
    /// * `features` - The active feature ids, one per template.
    /// * `gold` - The correct class.
    ///
    /// # Returns
    /// The class that was predicted before updating.
    pub fn train_one(&mut self, features: &[u64], gold: ClassId) -> Result<ClassId> {
        let guess = argmax(self.score(features), None).unwrap_or(0);
        self.record_outcome(guess == gold);

        let mut batch = UpdateBatch::new();
        perceptron_batch(&mut batch, features, guess, gold);

        if batch.is_effective() {
            self.update(&batch)?;
        } else {
            self.tick()?;
        }

        Ok(guess)
    }
}
