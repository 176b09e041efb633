//! Emits the binding module for a small registry fragment to stdout.

use vulk_generator::{generator, Model, Registry};

const FRAGMENT: &str = r#"
<registry>
    <types>
        <type category="basetype">typedef <type>uint32_t</type> <name>VkFlags</name>;</type>
        <type category="handle"><type>VK_DEFINE_HANDLE</type>(<name>VkInstance</name>)</type>
        <type category="handle"><type>VK_DEFINE_HANDLE</type>(<name>VkPhysicalDevice</name>)</type>
        <type category="enum" name="VkResult"/>
    </types>
    <enums name="VkResult" type="enum">
        <enum name="VK_SUCCESS" value="0"/>
        <enum name="VK_INCOMPLETE" value="5"/>
        <enum name="VK_ERROR_INITIALIZATION_FAILED" value="-3"/>
    </enums>
    <commands>
        <command successcodes="VK_SUCCESS,VK_INCOMPLETE" errorcodes="VK_ERROR_INITIALIZATION_FAILED">
            <proto><type>VkResult</type> <name>vkEnumeratePhysicalDevices</name></proto>
            <param><type>VkInstance</type> <name>instance</name></param>
            <param><type>uint32_t</type>* <name>pPhysicalDeviceCount</name></param>
            <param><type>VkPhysicalDevice</type>* <name>pPhysicalDevices</name></param>
        </command>
    </commands>
</registry>"#;

fn main() {
    env_logger::init();
    let registry = Registry::parse(FRAGMENT.as_bytes()).unwrap();
    let model = Model::build(&registry).unwrap();
    print!("{}", generator::emit_bindings(&model));
}
