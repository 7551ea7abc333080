//! Lazily built, cached method bodies.
//!
//! A [`Generator`] wraps the callback that produces the IAL program of one method.
//! The callback runs at most once per successful generation: the first call of
//! [`Generator::generate`] runs it against a fresh [`Emitter`] and caches the
//! finished batch, every later call replays the cached batch. Clones of a generator
//! share the cache.

use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, OnceLock,
    },
};

use crate::{
    analyzing::{program::InstructionBatch, DirectMethod, Emitter},
    Error, Result,
};

type GenerateFn = dyn Fn(&mut Emitter) -> Result<()> + Send + Sync;

struct GeneratorInner {
    name: Option<String>,
    generate: Box<GenerateFn>,
    program: OnceLock<InstructionBatch>,
    generations: AtomicUsize,
}

/// Cached program producer of one method.
///
/// # Example
///
/// ```rust
/// use dotsim::analyzing::{Emitter, Generator};
///
/// let generator = Generator::new(|e| {
///     e.assign_literal("x", 1);
///     e.return_value("x");
///     Ok(())
/// });
///
/// let first = generator.program()?;
/// let second = generator.program()?;
/// assert!(first.ptr_eq(&second));
/// assert_eq!(generator.generation_count(), 1);
/// # Ok::<(), dotsim::Error>(())
/// ```
#[derive(Clone)]
pub struct Generator(Arc<GeneratorInner>);

impl Generator {
    /// Creates a generator from a producer callback.
    pub fn new<F>(generate: F) -> Self
    where
        F: Fn(&mut Emitter) -> Result<()> + Send + Sync + 'static,
    {
        Self::build(None, Box::new(generate))
    }

    /// Creates a named generator; the name shows up in logs and traces.
    pub fn named<F>(name: impl Into<String>, generate: F) -> Self
    where
        F: Fn(&mut Emitter) -> Result<()> + Send + Sync + 'static,
    {
        Self::build(Some(name.into()), Box::new(generate))
    }

    /// Creates a generator whose program is a single invocation of a native method.
    #[must_use]
    pub fn direct(method: DirectMethod) -> Self {
        let name = method.name().to_string();
        Self::build(
            Some(name),
            Box::new(move |e: &mut Emitter| {
                e.direct_invoke(method.clone());
                Ok(())
            }),
        )
    }

    fn build(name: Option<String>, generate: Box<GenerateFn>) -> Self {
        Generator(Arc::new(GeneratorInner {
            name,
            generate,
            program: OnceLock::new(),
            generations: AtomicUsize::new(0),
        }))
    }

    /// Name of this generator, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    /// Writes the program of this generator into `emitter`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generator`] if the producer callback fails, and a usage error
    /// if `emitter` is not empty.
    pub fn generate(&self, emitter: &mut Emitter) -> Result<()> {
        let program = self.program()?;
        emitter.insert(program)
    }

    /// Returns the program, running the producer callback on first use.
    ///
    /// Failed generations are not cached; the next call runs the callback again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generator`] wrapping the producer's error, or the error of
    /// finishing the emitted program (e.g. an unbound label).
    pub fn program(&self) -> Result<InstructionBatch> {
        if let Some(program) = self.0.program.get() {
            return Ok(program.clone());
        }

        let mut emitter = Emitter::new();
        (self.0.generate)(&mut emitter).map_err(|e| Error::Generator(Box::new(e)))?;
        let program = emitter
            .get_emitted_instructions()
            .map_err(|e| Error::Generator(Box::new(e)))?;
        self.0.generations.fetch_add(1, Ordering::Relaxed);

        Ok(self.0.program.get_or_init(|| program).clone())
    }

    /// Returns `true` once the program has been generated.
    #[must_use]
    pub fn is_generated(&self) -> bool {
        self.0.program.get().is_some()
    }

    /// How many times the producer callback completed successfully.
    #[must_use]
    pub fn generation_count(&self) -> usize {
        self.0.generations.load(Ordering::Relaxed)
    }

    /// Returns `true` if both generators share the same callback and cache.
    #[must_use]
    pub fn ptr_eq(&self, other: &Generator) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("name", &self.0.name)
            .field("generated", &self.is_generated())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use super::*;
    use crate::analyzing::program::Instruction;

    #[test]
    fn test_generate_once() {
        let generator = Generator::new(|e| {
            e.nop();
            e.return_void();
            Ok(())
        });

        let mut first = Emitter::new();
        generator.generate(&mut first).unwrap();
        let mut second = Emitter::new();
        generator.generate(&mut second).unwrap();

        let a = first.get_emitted_instructions().unwrap();
        let b = second.get_emitted_instructions().unwrap();
        assert!(a.ptr_eq(&b));
        assert_eq!(a.len(), 2);
        assert_eq!(generator.generation_count(), 1);
    }

    #[test]
    fn test_failure_not_cached() {
        let fail = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&fail);
        let generator = Generator::new(move |e| {
            if flag.load(Ordering::Relaxed) {
                return Err(usage_error!("producer failed"));
            }
            e.return_void();
            Ok(())
        });

        assert!(matches!(generator.program(), Err(Error::Generator(_))));
        assert!(!generator.is_generated());
        assert_eq!(generator.generation_count(), 0);

        fail.store(false, Ordering::Relaxed);
        assert_eq!(generator.program().unwrap().len(), 1);
        assert_eq!(generator.generation_count(), 1);
    }

    #[test]
    fn test_unbound_label_is_generator_error() {
        let generator = Generator::new(|e| {
            let l = e.create_label("missing");
            e.jump(&l)
        });

        match generator.program() {
            Err(Error::Generator(inner)) => {
                assert!(matches!(*inner, Error::UnboundLabel(_)));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_direct_generator() {
        let generator = Generator::direct(DirectMethod::new("Native.Noop", |_| Ok(())));
        let program = generator.program().unwrap();

        assert_eq!(generator.name(), Some("Native.Noop"));
        assert_eq!(program.len(), 1);
        assert!(matches!(program[0].instruction, Instruction::DirectInvoke(_)));
    }

    #[test]
    fn test_clones_share_cache() {
        let generator = Generator::named("shared", |e| {
            e.nop();
            Ok(())
        });
        let clone = generator.clone();

        generator.program().unwrap();
        assert!(clone.is_generated());
        assert!(clone.ptr_eq(&generator));
    }
}
