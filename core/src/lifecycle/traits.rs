use async_trait::async_trait;

use super::types::MountProps;

/// 子应用导出给主应用的三个生命周期入口
#[async_trait]
pub trait GuestApp: Send + Sync {
    fn name(&self) -> &str;

    /// 一次性初始化；不能依赖全局状态（独立运行时 store 可能不存在）
    async fn bootstrap(&mut self) -> anyhow::Result<()>;

    /// 渲染到 `props.container`，注册并记录全部订阅
    async fn mount(&mut self, props: &MountProps) -> anyhow::Result<()>;

    /// 同步清空挂载点并退订挂载期间注册的全部监听器
    async fn unmount(&mut self, props: &MountProps) -> anyhow::Result<()>;
}
