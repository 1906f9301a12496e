use tracing::{debug, warn};

use crate::bail;
use crate::destination::{Destination, ExecResult, Transaction};
use crate::error::{ErrorKind, EtlResult};

/// Executes `statements` and returns one result per statement.
///
/// A single statement runs directly. Several statements run in one transaction that is rolled
/// back on the first failure.
pub async fn exec_statements<D>(
    destination: &D,
    statements: &[String],
) -> EtlResult<Vec<ExecResult>>
where
    D: Destination,
{
    match statements {
        [] => {
            bail!(ErrorKind::InvalidState, "No statements to execute");
        }
        [statement] => Ok(vec![destination.exec(statement).await?]),
        statements => {
            let mut transaction = destination.begin().await?;
            let mut results = Vec::with_capacity(statements.len());

            for statement in statements {
                match transaction.exec(statement).await {
                    Ok(result) => results.push(result),
                    Err(err) => {
                        if let Err(rollback_err) = transaction.rollback().await {
                            warn!(error = %rollback_err, "failed to roll back transaction");
                        }
                        return Err(err);
                    }
                }
            }

            transaction.commit().await?;
            debug!(statements = statements.len(), "committed statements");

            Ok(results)
        }
    }
}
