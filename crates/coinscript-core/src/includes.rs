//! Library catalog for the include engine. Each library carries the
//! names it exports, the feature flags that force its inclusion, and an
//! inline body spliced over `(include …)` before CLVM compilation so no
//! file system lookup is needed.

use std::collections::BTreeSet;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy)]
pub struct Library {
    pub name: &'static str,
    pub exports: &'static [&'static str],
    pub features: &'static [&'static str],
    pub body: &'static str,
}

const CONDITION_CODES_BODY: &str = "\
(defconstant REMARK 1)
(defconstant AGG_SIG_UNSAFE 49)
(defconstant AGG_SIG_ME 50)
(defconstant CREATE_COIN 51)
(defconstant RESERVE_FEE 52)
(defconstant CREATE_COIN_ANNOUNCEMENT 60)
(defconstant ASSERT_COIN_ANNOUNCEMENT 61)
(defconstant CREATE_PUZZLE_ANNOUNCEMENT 62)
(defconstant ASSERT_PUZZLE_ANNOUNCEMENT 63)
(defconstant ASSERT_MY_COIN_ID 70)
(defconstant ASSERT_MY_PARENT_ID 71)
(defconstant ASSERT_MY_PUZZLEHASH 72)
(defconstant ASSERT_MY_AMOUNT 73)
(defconstant ASSERT_SECONDS_RELATIVE 80)
(defconstant ASSERT_SECONDS_ABSOLUTE 81)
(defconstant ASSERT_HEIGHT_RELATIVE 82)
(defconstant ASSERT_HEIGHT_ABSOLUTE 83)";

const UTILITY_MACROS_BODY: &str = "\
(defmacro assert items
    (if (r items)
        (list if (f items) (c assert (r items)) (q . (x)))
        (f items)
    )
)
(defmacro or ARGS
    (if ARGS
        (qq (if (unquote (f ARGS)) 1 (unquote (c or (r ARGS)))))
        0
    )
)
(defmacro and ARGS
    (if ARGS
        (qq (if (unquote (f ARGS)) (unquote (c and (r ARGS))) ()))
        1
    )
)";

const SHA256TREE_BODY: &str = "\
(defun sha256tree (TREE)
    (if (l TREE)
        (sha256 2 (sha256tree (f TREE)) (sha256tree (r TREE)))
        (sha256 1 TREE)
    )
)";

const CURRY_AND_TREEHASH_BODY: &str = "\
(defconstant ONE 1)
(defconstant TWO 2)
(defconstant A_KW 2)
(defconstant Q_KW 1)
(defconstant C_KW 4)
(defun update-hash-for-parameter-hash (parameter-hash environment-hash)
    (sha256 TWO (sha256 ONE C_KW)
                (sha256 TWO (sha256 TWO (sha256 ONE Q_KW) parameter-hash)
                            (sha256 TWO environment-hash (sha256 ONE 0))))
)
(defun build-curry-list (reversed-curry-parameter-hashes environment-hash)
    (if reversed-curry-parameter-hashes
        (build-curry-list (r reversed-curry-parameter-hashes)
                          (update-hash-for-parameter-hash (f reversed-curry-parameter-hashes)
                                                          environment-hash))
        environment-hash
    )
)
(defun tree-hash-of-apply (function-hash environment-hash)
    (sha256 TWO (sha256 ONE A_KW)
                (sha256 TWO (sha256 TWO (sha256 ONE Q_KW) function-hash)
                            (sha256 TWO environment-hash (sha256 ONE 0))))
)
(defun puzzle-hash-of-curried-function (function-hash . reversed-curry-parameter-hashes)
    (tree-hash-of-apply function-hash
                        (build-curry-list reversed-curry-parameter-hashes (sha256 ONE ONE)))
)";

const CAT_TRUTHS_BODY: &str = "\
(defun-inline cat_truth_data_to_truth_struct (innerpuzhash cat_struct my_id this_coin_info)
    (c (c innerpuzhash cat_struct) (c my_id this_coin_info))
)
(defun-inline my_inner_puzzle_hash_cat_truths (Truths) (f (f Truths)))
(defun-inline cat_struct_truths (Truths) (r (f Truths)))
(defun-inline my_id_cat_truths (Truths) (f (r Truths)))
(defun-inline my_coin_info_truths (Truths) (r (r Truths)))
(defun-inline my_parent_cat_truths (Truths) (f (my_coin_info_truths Truths)))
(defun-inline my_puzhash_cat_truths (Truths) (f (r (my_coin_info_truths Truths))))
(defun-inline my_amount_cat_truths (Truths) (f (r (r (my_coin_info_truths Truths)))))
(defun-inline cat_mod_hash_truths (Truths) (f (cat_struct_truths Truths)))
(defun-inline cat_mod_hash_hash_truths (Truths) (f (r (cat_struct_truths Truths))))
(defun-inline cat_tail_program_hash_truths (Truths) (f (r (r (cat_struct_truths Truths)))))";

const SINGLETON_TRUTHS_BODY: &str = "\
(defun-inline truth_data_to_truth_struct (my_id full_puzhash innerpuzhash my_amount lineage_proof singleton_struct)
    (c (c my_id full_puzhash) (c (c innerpuzhash my_amount) (c lineage_proof singleton_struct)))
)
(defun-inline my_id_truth (Truths) (f (f Truths)))
(defun-inline my_full_puzzle_hash_truth (Truths) (r (f Truths)))
(defun-inline my_inner_puzzle_hash_truth (Truths) (f (f (r Truths))))
(defun-inline my_amount_truth (Truths) (r (f (r Truths))))
(defun-inline my_lineage_proof_truth (Truths) (f (r (r Truths))))
(defun-inline singleton_struct_truth (Truths) (r (r (r Truths))))
(defun-inline singleton_mod_hash_truth (Truths) (f (singleton_struct_truth Truths)))
(defun-inline singleton_launcher_id_truth (Truths) (f (r (singleton_struct_truth Truths))))
(defun-inline singleton_launcher_puzzle_hash_truth (Truths) (r (r (singleton_struct_truth Truths))))";

const OPCODES_BODY: &str = "\
(defconstant QUOTE 1)
(defconstant APPLY 2)
(defconstant IF 3)
(defconstant CONS 4)
(defconstant FIRST 5)
(defconstant REST 6)
(defconstant LISTP 7)
(defconstant RAISE 8)
(defconstant EQ 9)
(defconstant GTS 10)
(defconstant SHA256 11)
(defconstant SUBSTR 12)
(defconstant STRLEN 13)
(defconstant CONCAT 14)
(defconstant ADD 16)
(defconstant SUBTRACT 17)
(defconstant MULTIPLY 18)
(defconstant DIVIDE 19)
(defconstant DIVMOD 20)
(defconstant GT 21)
(defconstant ASH 22)
(defconstant LSH 23)
(defconstant LOGAND 24)
(defconstant LOGIOR 25)
(defconstant LOGXOR 26)
(defconstant LOGNOT 27)
(defconstant POINT_ADD 28)
(defconstant PUBKEY_FOR_EXP 29)
(defconstant NOT 30)
(defconstant ANY 31)
(defconstant ALL 32)
(defconstant SOFTFORK 33)";

pub const LIBRARIES: &[Library] = &[
    Library {
        name: "condition_codes.clib",
        exports: &[
            "REMARK",
            "AGG_SIG_UNSAFE",
            "AGG_SIG_ME",
            "CREATE_COIN",
            "RESERVE_FEE",
            "CREATE_COIN_ANNOUNCEMENT",
            "ASSERT_COIN_ANNOUNCEMENT",
            "CREATE_PUZZLE_ANNOUNCEMENT",
            "ASSERT_PUZZLE_ANNOUNCEMENT",
            "ASSERT_MY_COIN_ID",
            "ASSERT_MY_PARENT_ID",
            "ASSERT_MY_PUZZLEHASH",
            "ASSERT_MY_AMOUNT",
            "ASSERT_SECONDS_RELATIVE",
            "ASSERT_SECONDS_ABSOLUTE",
            "ASSERT_HEIGHT_RELATIVE",
            "ASSERT_HEIGHT_ABSOLUTE",
        ],
        features: &[
            "REMARK",
            "AGG_SIG_UNSAFE",
            "AGG_SIG_ME",
            "CREATE_COIN",
            "RESERVE_FEE",
            "CREATE_COIN_ANNOUNCEMENT",
            "ASSERT_COIN_ANNOUNCEMENT",
            "CREATE_PUZZLE_ANNOUNCEMENT",
            "ASSERT_PUZZLE_ANNOUNCEMENT",
            "ASSERT_MY_COIN_ID",
            "ASSERT_MY_PARENT_ID",
            "ASSERT_MY_PUZZLEHASH",
            "ASSERT_MY_AMOUNT",
            "ASSERT_SECONDS_RELATIVE",
            "ASSERT_SECONDS_ABSOLUTE",
            "ASSERT_HEIGHT_RELATIVE",
            "ASSERT_HEIGHT_ABSOLUTE",
        ],
        body: CONDITION_CODES_BODY,
    },
    Library {
        name: "utility_macros.clib",
        exports: &["assert", "or", "and"],
        features: &["assert", "or", "and"],
        body: UTILITY_MACROS_BODY,
    },
    Library {
        name: "sha256tree.clib",
        exports: &["sha256tree"],
        features: &["sha256tree"],
        body: SHA256TREE_BODY,
    },
    Library {
        name: "curry-and-treehash.clinc",
        exports: &[
            "puzzle-hash-of-curried-function",
            "tree-hash-of-apply",
            "build-curry-list",
            "update-hash-for-parameter-hash",
        ],
        features: &["puzzle-hash-of-curried-function"],
        body: CURRY_AND_TREEHASH_BODY,
    },
    Library {
        name: "cat_truths.clib",
        exports: &[
            "cat_truth_data_to_truth_struct",
            "my_inner_puzzle_hash_cat_truths",
            "cat_struct_truths",
            "my_id_cat_truths",
            "my_coin_info_truths",
            "my_parent_cat_truths",
            "my_puzhash_cat_truths",
            "my_amount_cat_truths",
            "cat_mod_hash_truths",
            "cat_mod_hash_hash_truths",
            "cat_tail_program_hash_truths",
        ],
        features: &["_cat_truths"],
        body: CAT_TRUTHS_BODY,
    },
    Library {
        name: "singleton_truths.clib",
        exports: &[
            "truth_data_to_truth_struct",
            "my_id_truth",
            "my_full_puzzle_hash_truth",
            "my_inner_puzzle_hash_truth",
            "my_amount_truth",
            "my_lineage_proof_truth",
            "singleton_struct_truth",
            "singleton_mod_hash_truth",
            "singleton_launcher_id_truth",
            "singleton_launcher_puzzle_hash_truth",
        ],
        features: &["_singleton_truths"],
        body: SINGLETON_TRUTHS_BODY,
    },
    Library {
        name: "opcodes.clib",
        exports: &[
            "QUOTE", "APPLY", "IF", "CONS", "FIRST", "REST", "LISTP", "RAISE", "EQ", "GTS",
            "SHA256", "SUBSTR", "STRLEN", "CONCAT", "ADD", "SUBTRACT", "MULTIPLY", "DIVIDE",
            "DIVMOD", "GT", "ASH", "LSH", "LOGAND", "LOGIOR", "LOGXOR", "LOGNOT", "POINT_ADD",
            "PUBKEY_FOR_EXP", "NOT", "ANY", "ALL", "SOFTFORK",
        ],
        features: &["_opcodes_constants"],
        body: OPCODES_BODY,
    },
];

pub fn library(name: &str) -> Option<&'static Library> {
    LIBRARIES.iter().find(|lib| lib.name == name)
}

/// The canonical library for a feature flag. Every feature belongs to
/// exactly one library, which keeps the computed include set minimal.
pub fn library_for_feature(feature: &str) -> Option<&'static Library> {
    LIBRARIES
        .iter()
        .find(|lib| lib.features.contains(&feature))
}

/// Extends `manual` with the libraries needed to resolve every feature
/// in use. Manual entries are preserved in order, duplicates are not
/// added, and an unresolvable feature names itself in the error.
pub fn determine_required_includes(
    features: &BTreeSet<String>,
    manual: &[String],
) -> Result<Vec<String>> {
    let mut includes: Vec<String> = Vec::new();
    for name in manual {
        if !includes.contains(name) {
            includes.push(name.clone());
        }
    }
    for feature in features {
        let lib = library_for_feature(feature).ok_or_else(|| {
            Error::builder(format!("no library resolves feature `{feature}`"))
        })?;
        if !includes.contains(&lib.name.to_string()) {
            includes.push(lib.name.to_string());
        }
    }
    Ok(includes)
}

/// Splices inline library bodies over `(include <name>)` references.
/// Unknown includes are left for the CLVM compiler to reject.
pub fn expand_includes(source: &str) -> String {
    let mut out = source.to_string();
    for lib in LIBRARIES {
        let reference = format!("(include {})", lib.name);
        if out.contains(&reference) {
            out = out.replace(&reference, lib.body);
        }
    }
    out
}
