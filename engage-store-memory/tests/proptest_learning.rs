//! Property: proposing the same `(workspace, content)` learning any number
//! of times leaves exactly one row in the store, under whatever learning
//! type and whatever repeat count is generated.

use proptest::prelude::*;

use engage_core::{CallContext, LearningStore, NewLearning};
use engage_store_memory::MemoryLearningStore;
use engage_types::LearningType;

fn learning_type_for(tag: u8) -> LearningType {
    if tag % 2 == 0 {
        LearningType::CodeLearnings
    } else {
        LearningType::DomainLearnings
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn repeated_propose_is_idempotent(
        workspace in "[0-9]{1,6}",
        content in "[a-zA-Z0-9 ]{1,80}",
        type_tag in any::<u8>(),
        repeats in 1usize..6,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = MemoryLearningStore::new();
            let ctx = CallContext::background();
            let mut ids = Vec::new();
            for _ in 0..repeats {
                let id = store
                    .propose(
                        NewLearning {
                            workspace: workspace.clone(),
                            learning_type: learning_type_for(type_tag),
                            content: content.clone(),
                        },
                        &ctx,
                    )
                    .await
                    .unwrap();
                ids.push(id);
            }
            prop_assert!(ids.windows(2).all(|w| w[0] == w[1]));
            prop_assert_eq!(store.list_by_workspace(&workspace, &ctx).await.unwrap().len(), 1);
            Ok(())
        })?;
    }
}
