//! Interactive rename resolver.
//!
//! Known renames are applied first. For each remaining created entity
//! the user picks between "create" and one of the remaining deleted
//! entities of the same kind.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::Mutex;

use schemadiff_core::error::BoxError;
use schemadiff_core::{
    Column, MappedResolver, RenameResolver, Renamed, Resolution, ResolverInput, Table, View,
};

pub struct PromptResolver<R> {
    input: Mutex<R>,
    known: MappedResolver,
}

impl PromptResolver<BufReader<Stdin>> {
    #[must_use]
    pub fn stdin(known: MappedResolver) -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), known)
    }
}

impl<R: AsyncBufRead + Unpin + Send> PromptResolver<R> {
    #[must_use]
    pub fn new(input: R, known: MappedResolver) -> Self {
        Self {
            input: Mutex::new(input),
            known,
        }
    }

    async fn ask(&self, question: &str, max: usize) -> Result<usize, BoxError> {
        let mut input = self.input.lock().await;
        loop {
            eprint!("{question} [0-{max}]: ");
            let mut line = String::new();
            if input.read_line(&mut line).await? == 0 {
                return Err("input closed before the rename prompt was answered".into());
            }
            let answer = line.trim();
            if answer.is_empty() {
                return Ok(0);
            }
            match answer.parse::<usize>() {
                Ok(n) if n <= max => return Ok(n),
                _ => eprintln!("  expected a number between 0 and {max}"),
            }
        }
    }

    async fn choose<T>(
        &self,
        kind: &str,
        resolution: Resolution<T>,
        name: impl Fn(&T) -> String,
    ) -> Result<Resolution<T>, BoxError> {
        let Resolution {
            created,
            mut deleted,
            mut renamed_or_moved,
        } = resolution;
        let mut still_created = Vec::new();
        for entity in created {
            if deleted.is_empty() {
                still_created.push(entity);
                continue;
            }
            eprintln!("Is {kind} `{}` created or renamed from another {kind}?", name(&entity));
            eprintln!("  0) create");
            for (idx, candidate) in deleted.iter().enumerate() {
                eprintln!("  {}) rename `{}` -> `{}`", idx + 1, name(candidate), name(&entity));
            }
            match self.ask("choice", deleted.len()).await? {
                0 => still_created.push(entity),
                n => renamed_or_moved.push(Renamed {
                    from: deleted.remove(n - 1),
                    to: entity,
                }),
            }
        }
        Ok(Resolution {
            created: still_created,
            deleted,
            renamed_or_moved,
        })
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> RenameResolver for PromptResolver<R> {
    async fn tables(&self, input: ResolverInput<Table>) -> Result<Resolution<Table>, BoxError> {
        let known = self.known.tables(input).await?;
        self.choose("table", known, |t| t.name.clone()).await
    }

    async fn columns(
        &self,
        table: &str,
        input: ResolverInput<Column>,
    ) -> Result<Resolution<Column>, BoxError> {
        let known = self.known.columns(table, input).await?;
        self.choose(&format!("column of `{table}`"), known, |c| c.name.clone())
            .await
    }

    async fn views(&self, input: ResolverInput<View>) -> Result<Resolution<View>, BoxError> {
        let known = self.known.views(input).await?;
        self.choose("view", known, |v| v.name.clone()).await
    }
}
