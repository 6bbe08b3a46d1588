use chia_protocol::{Coin, CoinSpend, Program, SpendBundle};
use chia_traits::Streamable;

use crate::clvm::{self, ClvmProgram};
use crate::error::{Error, Result};
use crate::puzzle::Puzzle;
use crate::tree::TreeNode;

pub fn make_coin(parent_coin_info: [u8; 32], puzzle_hash: [u8; 32], amount: u64) -> Coin {
    Coin::new(parent_coin_info.into(), puzzle_hash.into(), amount)
}

/// Assembles unsigned spend bundles. The aggregated signature stays the
/// identity element; signing happens outside this crate.
#[derive(Debug, Clone, Default)]
pub struct SpendBundleBuilder {
    spends: Vec<CoinSpend>,
}

impl SpendBundleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_spend(
        &mut self,
        coin: Coin,
        puzzle: &Puzzle,
        solution: &TreeNode,
    ) -> Result<&mut Self> {
        let program = puzzle.compile()?;
        self.add_program_spend(coin, &program, solution)
    }

    pub fn add_program_spend(
        &mut self,
        coin: Coin,
        puzzle: &ClvmProgram,
        solution: &TreeNode,
    ) -> Result<&mut Self> {
        let solution_bytes = clvm::serialize_ir(solution)?;
        self.spends.push(CoinSpend::new(
            coin,
            Program::from(puzzle.as_bytes().to_vec()),
            Program::from(solution_bytes),
        ));
        Ok(self)
    }

    pub fn build(&self) -> Result<SpendBundle> {
        if self.spends.is_empty() {
            return Err(Error::builder("spend bundle has no coin spends"));
        }
        Ok(SpendBundle::new(self.spends.clone(), Default::default()))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.build()?
            .to_bytes()
            .map_err(|e| Error::serialize(format!("cannot stream spend bundle: {e}")))
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self.build()?)
            .map_err(|e| Error::serialize(format!("cannot render spend bundle: {e}")))
    }
}
