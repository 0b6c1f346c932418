//! Order number allocation.
//!
//! A random short number is generated and the order row is inserted with it.
//! If the insert hits the per-business uniqueness constraint, the transaction
//! is rolled back to a savepoint taken just before the insert and a new number
//! is tried. Only that one statement is undone; earlier writes in the
//! transaction survive.

use std::collections::VecDeque;
use std::sync::Mutex;

use domain::Order;
use rand::Rng;
use rand::distributions::Alphanumeric;
use store::{ORDER_NUMBER_CONSTRAINT, StoreTransaction};

use crate::error::{Result, ServiceError};

/// Source of candidate order numbers.
pub trait OrderNumberGenerator: Send + Sync {
    fn generate(&self, length: usize) -> String;
}

/// Random ASCII letters and digits.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomOrderNumbers;

impl OrderNumberGenerator for RandomOrderNumbers {
    fn generate(&self, length: usize) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(length)
            .map(char::from)
            .collect()
    }
}

/// Hands out a fixed sequence of numbers, then falls back to random ones.
#[derive(Debug, Default)]
pub struct ScriptedOrderNumbers {
    queue: Mutex<VecDeque<String>>,
}

impl ScriptedOrderNumbers {
    pub fn new<I, S>(numbers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            queue: Mutex::new(numbers.into_iter().map(Into::into).collect()),
        }
    }
}

impl OrderNumberGenerator for ScriptedOrderNumbers {
    fn generate(&self, length: usize) -> String {
        let next = match self.queue.lock() {
            Ok(mut queue) => queue.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };
        next.unwrap_or_else(|| RandomOrderNumbers.generate(length))
    }
}

/// Inserts orders under a freshly generated number.
pub struct OrderNumberAllocator<'a> {
    generator: &'a dyn OrderNumberGenerator,
    length: usize,
    max_attempts: u32,
}

impl<'a> OrderNumberAllocator<'a> {
    pub fn new(generator: &'a dyn OrderNumberGenerator, length: usize, max_attempts: u32) -> Self {
        Self {
            generator,
            length,
            max_attempts,
        }
    }

    /// Inserts `order`, setting its `order_number` to the value that was
    /// accepted.
    ///
    /// Fails with `OrderNumberGenerationFailed` once every attempt collided.
    pub async fn insert(&self, tx: &mut dyn StoreTransaction, order: &mut Order) -> Result<()> {
        for attempt in 0..self.max_attempts {
            let savepoint = format!("sp_order_number_{attempt}");
            order.order_number = self.generator.generate(self.length);

            tx.savepoint(&savepoint).await?;
            match tx.insert_order(order).await {
                Ok(()) => {
                    tx.release_savepoint(&savepoint).await?;
                    return Ok(());
                }
                Err(err) if err.is_unique_violation_of(ORDER_NUMBER_CONSTRAINT) => {
                    metrics::counter!("order_number_collisions_total").increment(1);
                    tracing::debug!(
                        attempt,
                        order_number = %order.order_number,
                        "order number collision, retrying"
                    );
                    tx.rollback_to_savepoint(&savepoint).await?;
                    tx.release_savepoint(&savepoint).await?;
                }
                Err(err) => return Err(err.into()),
            }
        }

        order.order_number.clear();
        Err(ServiceError::OrderNumberGenerationFailed {
            attempts: self.max_attempts,
        })
    }
}
