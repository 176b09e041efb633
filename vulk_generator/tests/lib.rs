//! End-to-end generation over synthetic registry fragments: parse, build
//! the model, emit, and check the invariants the generated constants and
//! wrappers are trusted to satisfy.

use vulk_generator::model::{Convention, Scope};
use vulk_generator::{generator, Model, Registry};

fn model_of(xml: &str) -> Model {
    Model::build(&Registry::parse(xml.as_bytes()).unwrap()).unwrap()
}

const RANGES: &str = r#"
<registry>
    <types>
        <type category="enum" name="VkImageTiling"/>
        <type category="enum" name="VkColorSpaceKHR"/>
    </types>
    <enums name="VkImageTiling" type="enum">
        <enum name="VK_IMAGE_TILING_OPTIMAL" value="0"/>
        <enum name="VK_IMAGE_TILING_LINEAR" value="1"/>
    </enums>
    <enums name="VkColorSpaceKHR" type="enum">
        <enum name="VK_COLOR_SPACE_SRGB_NONLINEAR_KHR" value="0"/>
    </enums>
    <enums name="VkCullModeFlagBits" type="bitmask">
        <enum name="VK_CULL_MODE_FRONT_BIT" bitpos="0"/>
        <enum name="VK_CULL_MODE_BACK_BIT" bitpos="1"/>
    </enums>
</registry>"#;

#[test]
fn plain_enums_synthesize_the_range_quadruple() {
    let model = model_of(RANGES);
    let tiling = &model.enums["VkImageTiling"];
    assert_eq!(tiling.value_of("VK_IMAGE_TILING_BEGIN_RANGE"), Some(0));
    assert_eq!(tiling.value_of("VK_IMAGE_TILING_END_RANGE"), Some(1));
    assert_eq!(tiling.value_of("VK_IMAGE_TILING_RANGE_SIZE"), Some(2));
    assert_eq!(tiling.value_of("VK_IMAGE_TILING_MAX_ENUM"), Some(0x7FFF_FFFF));
}

#[test]
fn vendor_suffix_is_stripped_before_the_stem_is_derived() {
    let model = model_of(RANGES);
    let colorspace = &model.enums["VkColorSpaceKHR"];
    assert_eq!(colorspace.value_of("VK_COLOR_SPACE_BEGIN_RANGE"), Some(0));
    assert!(colorspace.value_of("VK_COLOR_SPACE_KHR_BEGIN_RANGE").is_none());
}

#[test]
fn bitmasks_get_exactly_one_sentinel_and_no_ranges() {
    let model = model_of(RANGES);
    let cull = &model.enums["VkCullModeFlagBits"];
    assert_eq!(cull.value_of("VK_CULL_MODE_FLAG_BITS_MAX_ENUM"), Some(0x7FFF_FFFF));
    let synthetic: Vec<_> = cull
        .members
        .iter()
        .filter(|(name, _)| name.contains("_RANGE") || name.contains("MAX_ENUM"))
        .collect();
    assert_eq!(synthetic.len(), 1);
}

const EXTENSION_CONSTANTS: &str = r#"
<registry>
    <types>
        <type category="enum" name="VkResult"/>
    </types>
    <enums name="VkResult" type="enum">
        <enum name="VK_SUCCESS" value="0"/>
    </enums>
    <extensions>
        <extension name="VK_EXT_sample" number="12" type="instance">
            <require>
                <enum name="VK_SAMPLE_FLAG_BIT" bitpos="4"/>
                <enum name="VK_SAMPLE_POSITIVE" offset="3" extends="VkResult"/>
                <enum name="VK_ERROR_SAMPLE" offset="3" dir="-" extends="VkResult"/>
            </require>
        </extension>
    </extensions>
</registry>"#;

#[test]
fn bit_position_constants_resolve_to_shifted_eight_digit_hex() {
    let model = model_of(EXTENSION_CONSTANTS);
    assert_eq!(model.macros["VK_SAMPLE_FLAG_BIT"].render(), "0x00000010");
    let emitted = generator::emit_bindings(&model);
    assert!(emitted.contains("pub const VK_SAMPLE_FLAG_BIT: u32 = 0x00000010;"));
}

#[test]
fn extension_offsets_follow_the_block_law_in_both_directions() {
    let model = model_of(EXTENSION_CONSTANTS);
    let result = &model.enums["VkResult"];
    assert_eq!(result.value_of("VK_SAMPLE_POSITIVE"), Some(1_000_011_003));
    assert_eq!(result.value_of("VK_ERROR_SAMPLE"), Some(-1_000_011_003));
}

const CLASSIFICATION: &str = r#"
<registry>
    <types>
        <type category="basetype">typedef <type>uint32_t</type> <name>VkBool32</name>;</type>
        <type category="handle"><type>VK_DEFINE_HANDLE</type>(<name>VkDevice</name>)</type>
        <type category="handle"><type>VK_DEFINE_HANDLE</type>(<name>VkPhysicalDevice</name>)</type>
        <type category="enum" name="VkResult"/>
    </types>
    <enums name="VkResult" type="enum">
        <enum name="VK_SUCCESS" value="0"/>
        <enum name="VK_ERROR_DEVICE_LOST" value="-4"/>
    </enums>
    <commands>
        <command successcodes="VK_SUCCESS" errorcodes="VK_ERROR_DEVICE_LOST">
            <proto><type>VkResult</type> <name>vkQueueWaitIdle</name></proto>
            <param><type>VkQueue</type> <name>queue</name></param>
        </command>
        <command successcodes="VK_SUCCESS" errorcodes="VK_ERROR_DEVICE_LOST">
            <proto><type>VkResult</type> <name>vkCreateFence</name></proto>
            <param><type>VkDevice</type> <name>device</name></param>
            <param>const <type>VkFenceCreateInfo</type>* <name>pCreateInfo</name></param>
            <param><type>VkFence</type>* <name>pFence</name></param>
        </command>
        <command successcodes="VK_SUCCESS" errorcodes="VK_ERROR_DEVICE_LOST">
            <proto><type>VkResult</type> <name>vkEnumeratePhysicalDevices</name></proto>
            <param><type>VkInstance</type> <name>instance</name></param>
            <param><type>uint32_t</type>* <name>pPhysicalDeviceCount</name></param>
            <param><type>VkPhysicalDevice</type>* <name>pPhysicalDevices</name></param>
        </command>
        <command successcodes="VK_SUCCESS" errorcodes="VK_ERROR_DEVICE_LOST">
            <proto><type>VkResult</type> <name>vkGetFenceStatus</name></proto>
            <param><type>VkDevice</type> <name>device</name></param>
            <param><type>VkFence</type>* <name>pFence</name></param>
        </command>
        <command>
            <proto><type>VkBool32</type> <name>vkGetPhysicalDeviceFeatureXYZ</name></proto>
            <param><type>VkPhysicalDevice</type> <name>physicalDevice</name></param>
            <param><type>VkFeature</type>* <name>pFeature</name></param>
        </command>
        <command successcodes="VK_SUCCESS" errorcodes="VK_ERROR_DEVICE_LOST">
            <proto><type>VkResult</type> <name>vkAcquireNextImageKHR</name></proto>
            <param><type>VkDevice</type> <name>device</name></param>
            <param><type>uint32_t</type>* <name>pCount</name></param>
            <param><type>uint32_t</type>* <name>pImageIndex</name></param>
        </command>
    </commands>
</registry>"#;

#[test]
fn every_function_lands_in_exactly_one_convention_class() {
    let model = model_of(CLASSIFICATION);
    assert_eq!(model.functions.len(), 6);
    for f in &model.functions {
        let classes = [
            matches!(f.convention, Convention::Direct),
            matches!(f.convention, Convention::SingleAllocate { .. }),
            matches!(f.convention, Convention::QueryThenFill),
        ];
        assert_eq!(classes.iter().filter(|&&c| c).count(), 1, "{}", f.name);
    }
}

#[test]
fn override_lists_win_over_name_and_shape() {
    let model = model_of(CLASSIFICATION);
    let convention = |name: &str| {
        model
            .functions
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.convention.clone())
            .unwrap()
    };

    assert_eq!(convention("vkQueueWaitIdle"), Convention::Direct);
    assert_eq!(
        convention("vkCreateFence"),
        Convention::SingleAllocate { static_count: None }
    );
    assert_eq!(convention("vkEnumeratePhysicalDevices"), Convention::QueryThenFill);
    // Allocation exception: allocating prefix and a trailing mutable
    // pointer, still direct.
    assert_eq!(convention("vkGetFenceStatus"), Convention::Direct);
    // Boolean return forces direct regardless of shape.
    assert_eq!(convention("vkGetPhysicalDeviceFeatureXYZ"), Convention::Direct);
    // Count exception: the uint32_t* pair is not a query count.
    assert_eq!(
        convention("vkAcquireNextImageKHR"),
        Convention::SingleAllocate { static_count: None }
    );
}

const ALIASED_EXTENSION: &str = r#"
<registry>
    <types>
        <type category="handle"><type>VK_DEFINE_HANDLE</type>(<name>VkDevice</name>)</type>
        <type category="enum" name="VkResult"/>
    </types>
    <enums name="VkResult" type="enum">
        <enum name="VK_SUCCESS" value="0"/>
        <enum name="VK_ERROR_OUT_OF_DATE_KHR" value="-1000001004"/>
    </enums>
    <commands>
        <command successcodes="VK_SUCCESS" errorcodes="VK_ERROR_OUT_OF_DATE_KHR">
            <proto><type>VkResult</type> <name>vkTrimCommandPoolKHR</name></proto>
            <param><type>VkDevice</type> <name>device</name></param>
            <param><type>uint64_t</type> <name>commandPool</name></param>
        </command>
        <command name="vkTrimCommandPool" alias="vkTrimCommandPoolKHR"/>
    </commands>
    <extensions>
        <extension name="VK_KHR_maintenance1" number="70" type="device">
            <require>
                <command name="vkTrimCommandPoolKHR"/>
            </require>
        </extension>
    </extensions>
</registry>"#;

#[test]
fn an_alias_of_a_listed_command_shares_the_extension_scope() {
    let model = model_of(ALIASED_EXTENSION);
    assert_eq!(
        model.extensions.owner("vkTrimCommandPoolKHR"),
        Some(("VK_KHR_maintenance1", Scope::Device))
    );
    assert_eq!(
        model.extensions.owner("vkTrimCommandPool"),
        Some(("VK_KHR_maintenance1", Scope::Device))
    );

    let emitted = generator::emit_bindings(&model);
    assert!(emitted
        .contains("reg.register(Scope::Device, \"vkTrimCommandPoolKHR\", _bind_vkTrimCommandPoolKHR);"));
    assert!(emitted
        .contains("reg.register(Scope::Device, \"vkTrimCommandPool\", _bind_vkTrimCommandPool);"));
}

// The full round trip: one plain enum, one bitmask enum, one
// query-then-fill command owned by an instance extension.
const ROUND_TRIP: &str = r#"
<registry>
    <types>
        <type category="handle"><type>VK_DEFINE_HANDLE</type>(<name>VkInstance</name>)</type>
        <type category="enum" name="A"/>
        <type category="enum" name="BBit"/>
        <type category="enum" name="VkResult"/>
    </types>
    <enums name="A" type="enum">
        <enum name="A_ZERO" value="0"/>
        <enum name="A_ONE" value="1"/>
    </enums>
    <enums name="BBit" type="bitmask">
        <enum name="B_FIRST" bitpos="1"/>
    </enums>
    <enums name="VkResult" type="enum">
        <enum name="VK_SUCCESS" value="0"/>
        <enum name="VK_ERROR_UNKNOWN_FOO" value="-7"/>
    </enums>
    <commands>
        <command successcodes="VK_SUCCESS" errorcodes="VK_ERROR_UNKNOWN_FOO">
            <proto><type>VkResult</type> <name>vkGetFoo</name></proto>
            <param><type>VkInstance</type> <name>instance</name></param>
            <param><type>uint32_t</type>* <name>pFooCount</name></param>
            <param><type>VkFoo</type>* <name>pFoos</name></param>
        </command>
    </commands>
    <extensions>
        <extension name="VK_EXT_foo" number="3" type="instance">
            <require>
                <command name="vkGetFoo"/>
            </require>
        </extension>
    </extensions>
</registry>"#;

#[test]
fn round_trip_classifies_scopes_and_synthesizes() {
    let model = model_of(ROUND_TRIP);

    let get_foo = model.functions.iter().find(|f| f.name == "vkGetFoo").unwrap();
    assert_eq!(get_foo.convention, Convention::QueryThenFill);
    assert!(get_foo.is_extension);
    assert_eq!(model.extensions.owner("vkGetFoo"), Some(("VK_EXT_foo", Scope::Instance)));

    let a = &model.enums["A"];
    assert_eq!(a.value_of("A_BEGIN_RANGE"), Some(0));
    assert_eq!(a.value_of("A_END_RANGE"), Some(1));
    assert_eq!(a.value_of("A_RANGE_SIZE"), Some(2));
    assert_eq!(a.value_of("A_MAX_ENUM"), Some(0x7FFF_FFFF));

    let b = &model.enums["BBit"];
    assert_eq!(b.value_of("B_BIT_MAX_ENUM"), Some(0x7FFF_FFFF));
    assert!(b.value_of("B_BIT_BEGIN_RANGE").is_none());

    let emitted = generator::emit_bindings(&model);
    assert!(emitted.contains("pub const A_BEGIN_RANGE: A = 0;"));
    assert!(emitted.contains("pub const A_MAX_ENUM: A = 2147483647;"));
    assert!(emitted.contains("pub const B_BIT_MAX_ENUM: BBit = 0x7fffffff;"));
    assert!(emitted.contains("query_then_fill::<VkFoo>(&RESULT_CODES"));
    assert!(emitted.contains("reg.register(Scope::Instance, \"vkGetFoo\", _bind_vkGetFoo);"));
}

#[test]
fn broken_optional_surface_is_skipped_not_fatal() {
    // An extension with no usable number and a command with no proto are
    // both optional surface: the build continues without them.
    let xml = r#"
    <registry>
        <types>
            <type category="enum" name="VkThing"/>
        </types>
        <enums name="VkThing" type="enum">
            <enum name="VK_THING_ZERO" value="0"/>
        </enums>
        <commands>
            <command>
                <param><type>uint32_t</type> <name>orphan</name></param>
            </command>
        </commands>
        <extensions>
            <extension name="VK_EXT_numberless" type="instance"/>
        </extensions>
    </registry>"#;
    let model = model_of(xml);
    assert!(model.functions.is_empty());
    assert!(model.enums.contains_key("VkThing"));
    assert!(model.extensions.owner("anything").is_none());
}
