//! Outer-puzzle wrappers. Wrapping happens on the compiled form: the
//! canonical layer programs ship as byte constants, and the inner
//! puzzle is curried in positionally along with the layer parameters.

use chia_puzzles::{
    CAT_PUZZLE, CAT_PUZZLE_HASH, NFT_OWNERSHIP_LAYER, NFT_OWNERSHIP_LAYER_HASH, NFT_STATE_LAYER,
    NFT_STATE_LAYER_HASH, SINGLETON_LAUNCHER, SINGLETON_LAUNCHER_HASH, SINGLETON_TOP_LAYER_V1_1,
    SINGLETON_TOP_LAYER_V1_1_HASH,
};

use crate::clvm::ClvmProgram;
use crate::error::Result;
use crate::puzzle::Puzzle;
use crate::tree::TreeNode;

#[derive(Debug, Clone)]
pub enum Layer {
    Singleton {
        launcher_id: [u8; 32],
    },
    Cat {
        asset_id: [u8; 32],
    },
    NftState {
        metadata: TreeNode,
        metadata_updater_hash: [u8; 32],
    },
    NftOwnership {
        current_owner: Option<[u8; 32]>,
        transfer_program: TreeNode,
    },
}

impl Layer {
    pub fn name(&self) -> &'static str {
        match self {
            Layer::Singleton { .. } => "singleton",
            Layer::Cat { .. } => "cat",
            Layer::NftState { .. } => "nft_state",
            Layer::NftOwnership { .. } => "nft_ownership",
        }
    }

    /// Wraps `inner`, returning the outer program plus any companion
    /// puzzles the layer brings along (the singleton launcher).
    pub fn apply(&self, inner: &ClvmProgram) -> Result<(ClvmProgram, Vec<(String, Puzzle)>)> {
        let inner_ir = inner.to_ir()?;
        match self {
            Layer::Singleton { launcher_id } => {
                // SINGLETON_STRUCT = (MOD_HASH . (LAUNCHER_ID . LAUNCHER_PUZZLE_HASH))
                let singleton_struct = TreeNode::cons(
                    TreeNode::bytes(SINGLETON_TOP_LAYER_V1_1_HASH.to_vec()),
                    TreeNode::cons(
                        TreeNode::bytes(launcher_id.to_vec()),
                        TreeNode::bytes(SINGLETON_LAUNCHER_HASH.to_vec()),
                    ),
                );
                let outer = ClvmProgram::from_bytes(SINGLETON_TOP_LAYER_V1_1.to_vec())
                    .curry(&[singleton_struct, inner_ir])?;
                let launcher =
                    Puzzle::from_program(ClvmProgram::from_bytes(SINGLETON_LAUNCHER.to_vec()));
                Ok((outer, vec![("launcher".to_string(), launcher)]))
            }
            Layer::Cat { asset_id } => {
                let outer = ClvmProgram::from_bytes(CAT_PUZZLE.to_vec()).curry(&[
                    TreeNode::bytes(CAT_PUZZLE_HASH.to_vec()),
                    TreeNode::bytes(asset_id.to_vec()),
                    inner_ir,
                ])?;
                Ok((outer, Vec::new()))
            }
            Layer::NftState {
                metadata,
                metadata_updater_hash,
            } => {
                let outer = ClvmProgram::from_bytes(NFT_STATE_LAYER.to_vec()).curry(&[
                    TreeNode::bytes(NFT_STATE_LAYER_HASH.to_vec()),
                    metadata.clone(),
                    TreeNode::bytes(metadata_updater_hash.to_vec()),
                    inner_ir,
                ])?;
                Ok((outer, Vec::new()))
            }
            Layer::NftOwnership {
                current_owner,
                transfer_program,
            } => {
                let owner = match current_owner {
                    Some(owner) => TreeNode::bytes(owner.to_vec()),
                    None => TreeNode::nil(),
                };
                let outer = ClvmProgram::from_bytes(NFT_OWNERSHIP_LAYER.to_vec()).curry(&[
                    TreeNode::bytes(NFT_OWNERSHIP_LAYER_HASH.to_vec()),
                    owner,
                    transfer_program.clone(),
                    inner_ir,
                ])?;
                Ok((outer, Vec::new()))
            }
        }
    }
}
