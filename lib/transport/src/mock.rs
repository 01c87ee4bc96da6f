use crate::transport::Settle;

use mockall::mock;

mock! {
    pub Transport {}
    impl super::Transport for Transport {
        fn fire(&self, url: String, settle: Settle);

        fn name(&self) -> &'static str;
    }
}
