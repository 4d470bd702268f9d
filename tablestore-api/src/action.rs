//! The closed set of 13 API operations (§3) and their wire paths (§6).

/// One of the Service's 13 API operations. Each carries, at the type
/// level via the `tablestore-proto` codec, its request and response shapes;
/// here it only carries what the core needs: a wire path and an
/// idempotence classification (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    CreateTable,
    ListTable,
    DescribeTable,
    DeleteTable,
    UpdateTable,
    GetRow,
    PutRow,
    UpdateRow,
    DeleteRow,
    BatchGetRow,
    BatchWriteRow,
    GetRange,
    ComputeSplitPointsBySize,
}

impl Action {
    /// The fixed HTTP path for this action (§6).
    pub const fn path(self) -> &'static str {
        match self {
            Action::CreateTable => "/CreateTable",
            Action::ListTable => "/ListTable",
            Action::DescribeTable => "/DescribeTable",
            Action::DeleteTable => "/DeleteTable",
            Action::UpdateTable => "/UpdateTable",
            Action::GetRow => "/GetRow",
            Action::PutRow => "/PutRow",
            Action::UpdateRow => "/UpdateRow",
            Action::DeleteRow => "/DeleteRow",
            Action::BatchGetRow => "/BatchGetRow",
            Action::BatchWriteRow => "/BatchWriteRow",
            Action::GetRange => "/GetRange",
            Action::ComputeSplitPointsBySize => "/ComputeSplitPointsBySize",
        }
    }

    /// §4.3: whether re-issuing this action on an ambiguous failure is safe.
    pub const fn is_idempotent(self) -> bool {
        matches!(
            self,
            Action::ListTable
                | Action::DescribeTable
                | Action::DeleteTable
                | Action::CreateTable
                | Action::ComputeSplitPointsBySize
                | Action::GetRow
                | Action::BatchGetRow
                | Action::GetRange
                | Action::DeleteRow
        )
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path()[1..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotence_matches_spec_list() {
        let idempotent = [
            Action::ListTable,
            Action::DescribeTable,
            Action::DeleteTable,
            Action::CreateTable,
            Action::ComputeSplitPointsBySize,
            Action::GetRow,
            Action::BatchGetRow,
            Action::GetRange,
            Action::DeleteRow,
        ];
        let non_idempotent = [
            Action::UpdateTable,
            Action::PutRow,
            Action::UpdateRow,
            Action::BatchWriteRow,
        ];
        for a in idempotent {
            assert!(a.is_idempotent(), "{a} should be idempotent");
        }
        for a in non_idempotent {
            assert!(!a.is_idempotent(), "{a} should not be idempotent");
        }
    }

    #[test]
    fn paths_have_leading_slash() {
        assert_eq!(Action::GetRow.path(), "/GetRow");
        assert_eq!(Action::BatchWriteRow.path(), "/BatchWriteRow");
    }
}
